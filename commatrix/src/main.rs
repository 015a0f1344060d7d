#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

#[tokio::main]
async fn main() {
    if let Err(error) = commatrix_runtime::Args::parse_and_run().await {
        eprintln!("commatrix: {error:#}");
        std::process::exit(commatrix_runtime::exit_code(&error));
    }
}
