/// Example program to print the loaded configuration
///
/// Run with: cargo run -p rune-config --example print_config

fn main() {
    // Load configuration from rune.toml
    let config = rune_config::RuneConfig::load();

    println!("=== Rune Motion Configuration ===\n");

    println!("Motion Settings:");
    println!("  Reduced Motion: {}", config.motion.reduced_motion);
    println!("  Frame: {} ms", config.motion.frame_ms);
    println!();

    println!("Presence Settings:");
    println!("  Initial: {}", config.presence.initial);
    println!("  Exit Before Enter: {}", config.presence.exit_before_enter);
    println!();

    println!("Group Settings:");
    println!("  Stagger: {:?}", config.group.stagger());
    println!("  Direction: {:?}", config.group.direction);
    println!("  Enter: {} ms", config.group.enter_ms);
    println!("  Exit: {} ms", config.group.exit_ms);
    println!();

    println!("Demo Settings:");
    println!("  Frames: {}", config.demo.frames);
    println!("  Log Filter: {:?}", config.demo.log_filter);
    println!();

    // Try to serialize to TOML for verification
    match toml::to_string_pretty(&config) {
        Ok(toml_str) => {
            println!("=== Serialized Configuration ===");
            println!("{}", toml_str);
        }
        Err(e) => {
            eprintln!("Failed to serialize config: {}", e);
        }
    }
}
