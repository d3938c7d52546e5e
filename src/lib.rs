/// Tab Corral - auto-grouping and history engine for a Chrome tab manager
/// Built with Rust + WASM

pub mod browser;
pub mod color;
pub mod domain;
pub mod error;
pub mod grouping;
pub mod history;
pub mod recent;
pub mod retry;
pub mod session;
pub mod settings;
pub mod tab_data;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(target_arch = "wasm32")]
mod chrome;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;

    // Set up panic hook for better error messages in the browser console
    #[wasm_bindgen(start)]
    pub fn main() {
        console_error_panic_hook::set_once();
        wasm_logger::init(wasm_logger::Config::default());
    }

    // Re-export the pure classification functions for JavaScript access
    // (the popup colors and labels groups with the same logic).
    #[wasm_bindgen]
    pub fn auto_group_name(url: &str) -> String {
        crate::domain::auto_group_name(url)
    }

    #[wasm_bindgen]
    pub fn group_color(name: &str) -> String {
        crate::color::color_for_name(name).as_str().to_string()
    }

    // Start the background engine (called from the service worker).
    #[wasm_bindgen]
    pub fn start_background() {
        crate::chrome::start_background();
    }
}
