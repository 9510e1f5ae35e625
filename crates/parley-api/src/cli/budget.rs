//! `parley budget` -- print memory statistics and the selected model.

use super::{Settings, human_bytes, size_model};

pub async fn show_budget(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let sizing = size_model(&settings.config, None).await?;
    let stats = &sizing.stats;

    if json {
        let out = serde_json::json!({
            "stats": stats,
            "budget": sizing.budget,
            "model": sizing.model,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let optional = |v: Option<u64>| v.map(human_bytes).unwrap_or_else(|| "-".to_string());

    println!();
    println!("  {}", console::style("Memory").bold());
    println!("  host free        {}", human_bytes(stats.host_free));
    println!("  host available   {}", human_bytes(stats.host_available));
    println!("  host buffers     {}", optional(stats.host_buffers));
    println!("  swap free        {}", human_bytes(stats.swap_free));
    println!("  accelerator free {}", optional(stats.accelerator_free));
    println!();
    println!(
        "  {} budget {}",
        console::style("→").cyan(),
        console::style(human_bytes(sizing.budget)).bold()
    );
    println!(
        "  {} model  {} ({} parameters)",
        console::style("→").cyan(),
        console::style(&sizing.model.name).green().bold(),
        sizing.model.parameter_count
    );
    println!();
    Ok(())
}
