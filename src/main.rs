#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    // Set up logging for development
    env_logger::init();

    // File dialogs and exports run on the tokio runtime
    panel_craft::run_app()
}
