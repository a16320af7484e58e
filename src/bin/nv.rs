//! Short binary name (`nv`) that forwards to the `nvnotes` library.
//! Shipping the alias as a real binary avoids needing a shell alias.

fn main() {
    if let Err(err) = nvnotes::entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
