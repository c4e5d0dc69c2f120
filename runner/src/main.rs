use stagelink::core::StageApp;

fn main() {
    if let Err(e) = StageApp::run() {
        eprintln!("\nError: {:#}\n", e);
        std::process::exit(1);
    }
}
