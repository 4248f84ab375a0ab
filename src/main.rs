use tradebridge::app::{cli, logging};

fn main() {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    logging::init(&logging::LogSettings::from_env());
    if let Err(err) = cli::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
