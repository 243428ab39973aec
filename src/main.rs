// GUI-subsystem binary on Windows: no console window is allocated for the GUI.
// CLI mode (--input/-i flag present) attaches to the launching terminal so the
// status report is visible.
#![windows_subsystem = "windows"]

use datmant::app::DatmantApp;
use datmant::{cli, logger};
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // -- Windows console management ------------------------------------
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        unsafe extern "system" {
            fn AttachConsole(dwProcessId: u32) -> i32;
        }
        const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
        unsafe {
            AttachConsole(ATTACH_PARENT_PROCESS);
        }
    }

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("DATMant"),
        ..Default::default()
    };

    eframe::run_native(
        "DATMant",
        options,
        Box::new(|cc| Box::new(DatmantApp::new(cc))),
    )
}
