fn main() {
    if let Err(err) = batchmap::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
