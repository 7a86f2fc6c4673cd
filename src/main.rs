fn main() {
    if let Err(err) = inventory_report::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
