// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `bodyleak validate` command - Validate a tuning file.

use bodyleak_core::{HarnessResult, TuningLoader};

pub async fn execute(file: &str) -> HarnessResult<()> {
    tracing::debug!(file = %file, "Validating tuning");

    let tuning = TuningLoader::load_file(file)?;
    let policy = tuning.growth_policy();

    println!("✓ Tuning is valid");
    println!();
    println!("Run Shape:");
    println!("  Batch Size:       {}", tuning.batch_size);
    println!("  Warmup Rounds:    {}", tuning.warmup_rounds);
    println!("  Monitored Rounds: {}", tuning.monitored_rounds);
    println!();
    println!("Growth Ceiling:");
    println!("  Growth Factor:    {}", tuning.growth_factor);
    println!("  Per-Batch Floor:  {}", tuning.per_batch_floor);
    println!("  Limit (baseline 0): {}", policy.limit(0));
    println!();
    println!("Timing:");
    println!("  Collect Passes:   {}", tuning.collect_passes);
    println!("  Settle Delay:     {:?}", tuning.settle_delay);
    println!("  Stream Delay:     {:?}", tuning.stream_delay);
    println!("  Exit Delay:       {:?}", tuning.exit_delay);
    println!("  Request Timeout:  {:?}", tuning.request_timeout);
    Ok(())
}
