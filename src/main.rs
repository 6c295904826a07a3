fn main() {
    if let Err(err) = seeclick_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
