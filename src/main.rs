use std::process;

fn main() {
    if let Err(e) = localexec::cli::run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
