// src/advisory/prompt.rs
use std::fmt::Write as _;

use crate::scoring::Ranking;

/// Build the advisory prompt from one ranking.
pub fn build_prompt(role: &str, ranking: &Ranking) -> String {
    let mut ctx = String::new();
    let _ = writeln!(ctx, "Role: {role}");
    let _ = writeln!(ctx, "CPU utilization: {:.1}%", ranking.utilization_pct);
    let _ = writeln!(ctx, "Per-region emissions and pricing:");
    for r in &ranking.regions {
        let _ = writeln!(
            ctx,
            "- {}: {:.1} gCO2/kWh, {:.2} g/h, ${:.4}/h, score={:.3}",
            r.region, r.intensity_g_per_kwh, r.co2_g_per_hour, r.price_usd_h, r.weighted_score
        );
    }
    let _ = writeln!(ctx, "Lowest CO2: {}", ranking.best_region);
    let _ = write!(ctx, "Balanced (cost+carbon): {}", ranking.balanced_region);

    format!(
        "You are a cloud sustainability SRE.\n\n\
         Goal:\n\
         - Name the region that MINIMIZES CO2.\n\
         - Name a BALANCED region between carbon and price (carbon weight={:.2}).\n\n\
         Context:\n{ctx}\n\n\
         Answer briefly (<=120 words) and give 2 concrete actions.",
        ranking.weight_carbon
    )
}
