//! `parley checkpoint` -- inspect the stored checkpoint for a model.

use parley_core::store::ContextStore;
use parley_infra::file_store::FileContextStore;
use parley_types::error::StoreError;

use super::{Settings, size_model};

pub async fn show_checkpoint(settings: &Settings, model: Option<String>, json: bool) -> anyhow::Result<()> {
    let name = match model {
        Some(name) => name,
        None => size_model(&settings.config, None).await?.model.name,
    };

    let store = FileContextStore::new(&settings.data_dir);
    let checkpoint = match store.load(&name).await {
        Ok(checkpoint) => checkpoint,
        Err(StoreError::NotFound) => {
            if json {
                println!("{}", serde_json::json!({ "model": name, "found": false }));
            } else {
                println!(
                    "\n  {} No checkpoint for '{}' in {}\n",
                    console::style("✗").red(),
                    console::style(&name).cyan(),
                    settings.data_dir.display()
                );
            }
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if json {
        let out = serde_json::json!({
            "model": checkpoint.model,
            "found": true,
            "saved_at": checkpoint.saved_at,
            "state_len": checkpoint.state.len(),
            "isolated_rooms": checkpoint.room_states.keys().collect::<Vec<_>>(),
            "watermarks": checkpoint.watermarks,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Checkpoint for '{}'",
        console::style("✓").green(),
        console::style(&checkpoint.model).cyan()
    );
    println!("  saved at   {}", checkpoint.saved_at.to_rfc3339());
    println!("  state      {} values", checkpoint.state.len());
    if !checkpoint.room_states.is_empty() {
        println!("  per-room   {} rooms", checkpoint.room_states.len());
    }
    println!();
    if checkpoint.watermarks.is_empty() {
        println!("  {}", console::style("no watermarks").dim());
    }
    for (room, event) in checkpoint.watermarks.iter() {
        println!("  {room:<24} {}", console::style(event).dim());
    }
    println!();
    Ok(())
}
