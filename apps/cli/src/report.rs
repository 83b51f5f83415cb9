use std::fmt::Write;

use allocation_engine::{FinderOutcome, Phase2Diagnostics};
use allocation_model::{Allocation, Instance};
use envy_analysis::{EnvyReport, efx_envy_report, envy_report};

pub fn render_run_report(instance: &Instance, outcome: &FinderOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", value_table(instance));
    let _ = writeln!(out, "{}", allocation_summary(instance, &outcome.allocation));
    let _ = writeln!(out, "{}", envy_summary(instance, &outcome.allocation));
    let _ = writeln!(
        out,
        "EFX status: {}",
        if outcome.efx { "satisfied" } else { "NOT satisfied" }
    );
    if outcome.phase2.executed {
        let _ = write!(out, "{}", phase2_summary(&outcome.phase2));
    }
    out
}

pub fn value_table(instance: &Instance) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:<8}", "good");
    for agent in instance.agents() {
        let _ = write!(out, "{:>12}", agent.name());
    }
    let _ = writeln!(out);
    for good in instance.goods() {
        let _ = write!(out, "{good:<8}");
        for agent in instance.agents() {
            let _ = write!(out, "{:>12.3}", agent.value(good));
        }
        let _ = writeln!(out);
    }
    let _ = write!(out, "{:<8}", "disp");
    for agent in instance.agents() {
        let _ = write!(out, "{:>12.3}", agent.dispersion());
    }
    out
}

pub fn allocation_summary(instance: &Instance, allocation: &Allocation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "allocation:");
    let mut total = 0.0;
    for agent in instance.agents() {
        let bundle = allocation.bundle(agent.name());
        let utility = allocation.utility(agent.name());
        total += utility;
        let _ = writeln!(
            out,
            "  {}: [{}] (utility {utility:.3})",
            agent.name(),
            bundle.join(", ")
        );
    }
    let _ = write!(out, "  total utility {total:.3}");
    out
}

pub fn envy_summary(instance: &Instance, allocation: &Allocation) -> String {
    let plain = envy_report(instance, allocation);
    let efx = efx_envy_report(instance, allocation);
    let mut out = String::new();
    let _ = writeln!(out, "envy matrix (plain / efx):");
    let _ = write!(out, "{:<8}", "");
    for envied in instance.agents() {
        let _ = write!(out, "{:>16}", envied.name());
    }
    let _ = writeln!(out);
    for envier in instance.agents() {
        let _ = write!(out, "{:<8}", envier.name());
        for envied in instance.agents() {
            let cell = format!(
                "{:.3}/{:.3}",
                plain.envy(envier.name(), envied.name()),
                efx.envy(envier.name(), envied.name())
            );
            let _ = write!(out, "{cell:>16}");
        }
        let _ = writeln!(out);
    }
    let _ = write!(
        out,
        "total envy {:.3}, total efx-envy {:.3}{}",
        plain.total(),
        efx.total(),
        worst_pair_note(instance, &plain)
    );
    out
}

fn worst_pair_note(instance: &Instance, plain: &EnvyReport) -> String {
    let mut worst: Option<(&str, &str, f64)> = None;
    for envier in instance.agents() {
        for envied in instance.agents() {
            let value = plain.envy(envier.name(), envied.name());
            if value > 0.0 && worst.map(|(_, _, w)| value > w).unwrap_or(true) {
                worst = Some((envier.name(), envied.name(), value));
            }
        }
    }
    match worst {
        Some((envier, envied, value)) => {
            format!(" (worst pair {envier} -> {envied}: {value:.3})")
        }
        None => String::new(),
    }
}

pub fn phase2_summary(diagnostics: &Phase2Diagnostics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "redistribution phase:");
    let _ = writeln!(out, "  steps: {}", diagnostics.steps);
    let _ = writeln!(
        out,
        "  efx achieved: {}",
        if diagnostics.efx_achieved { "yes" } else { "no" }
    );
    let _ = write!(
        out,
        "  envy {:.3} -> {:.3} (reduced by {:.3})",
        diagnostics.initial_envy, diagnostics.final_envy, diagnostics.envy_reduction
    );
    out
}
