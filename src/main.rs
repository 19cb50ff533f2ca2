use grove_engine::config::EngineConfig;
use grove_engine::demo::Demo;

const CONFIG_PATH: &str = "config/engine.json";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("=== Grove Engine Starting ===");
    let config = EngineConfig::load_or_default(CONFIG_PATH);
    let demo = Demo::new(&config)?;
    let frames = demo.run()?;
    log::info!("Engine shutdown complete after {} frames", frames);
    Ok(())
}
