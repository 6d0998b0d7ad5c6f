fn main() {
    if let Err(err) = autolife::run() {
        autolife_sdk::ui::error(&format!("{err:#}"));
        std::process::exit(1);
    }
}
