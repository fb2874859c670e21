use super::open_manager;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = open_manager()?;
    let stats = manager.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
