fn main() {
    if let Err(err) = nvnotes::entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
