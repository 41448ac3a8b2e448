//! List the built-in motion presets.

use beatreel_render_engine::PresetLibrary;

pub fn run() -> anyhow::Result<()> {
    let library = PresetLibrary::builtin();

    println!("Motion presets");
    println!("{}", "=".repeat(50));
    for preset in library.iter() {
        let (start_zoom, end_zoom) = preset.zoom();
        let ((sx, sy), (ex, ey)) = preset.pan();
        println!(
            "  {:<14} zoom {start_zoom:.2} -> {end_zoom:.2}  pan ({sx:.2}, {sy:.2}) -> ({ex:.2}, {ey:.2})  {}",
            preset.name(),
            preset.easing().as_str(),
        );
    }

    Ok(())
}
