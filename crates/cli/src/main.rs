fn main() {
    hospital_map_cli::init_logging();

    if let Err(error) = hospital_map_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
