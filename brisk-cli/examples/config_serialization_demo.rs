use brisk_cli::{BriskPipeline, Config, ExtractorBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔧 BRISK Configuration Serialization Demo");
    println!("==========================================\n");

    // Demo 1: Create configurations
    println!("📋 Demo 1: Creating Configurations");
    let default_config = Config::new().with_metadata("Default", "Rotation and scale invariant");
    let upright_config = Config::upright_preset();
    let compact_config = ExtractorBuilder::new()
        .preset_compact()
        .rotations(128)
        .to_config()?
        .with_metadata("Tiny", "128 rotations, 16 scales");

    for config in [&default_config, &upright_config, &compact_config] {
        println!("   • {}", config.summary());
    }

    // Demo 2: JSON round trip
    println!("\n📄 Demo 2: JSON Serialization");
    let json = compact_config.to_json()?;
    println!("   {}", &json[..200.min(json.len())]);
    compact_config.save_json("brisk_compact.json")?;
    let from_json = Config::load_json("brisk_compact.json")?;
    assert_eq!(from_json, compact_config);
    println!("   ✅ Saved and reloaded brisk_compact.json");

    // Demo 3: TOML round trip
    println!("\n📋 Demo 3: TOML Serialization");
    let toml = upright_config.to_toml()?;
    println!("{}", toml);
    upright_config.save_toml("brisk_upright.toml")?;
    let from_toml = Config::load_toml("brisk_upright.toml")?;
    assert_eq!(from_toml, upright_config);
    println!("   ✅ Saved and reloaded brisk_upright.toml");

    // Demo 4: Loaded configs drive a pipeline
    println!("\n⚙️  Demo 4: Pipeline from loaded configuration");
    let pipeline = BriskPipeline::new(from_json)?;
    println!("{}", brisk_cli::pattern_summary(pipeline.pattern()));

    // Demo 5: Validation
    println!("\n🚫 Demo 5: Validation");
    match Config::from_json(&json.replace("\"pattern_scale\": 1.0", "\"pattern_scale\": -1.0")) {
        Ok(_) => println!("   unexpected: negative pattern scale accepted"),
        Err(e) => println!("   rejected: {}", e),
    }
    match Config::from_json(&json.replace("\"version\": 1", "\"version\": 7")) {
        Ok(_) => println!("   unexpected: version 7 accepted"),
        Err(e) => println!("   rejected: {}", e),
    }

    std::fs::remove_file("brisk_compact.json").ok();
    std::fs::remove_file("brisk_upright.toml").ok();
    Ok(())
}
