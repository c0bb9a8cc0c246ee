//! Terminal rendering of problem data and solve reports.

use std::fmt::Write;

use refinery_model::{MaterialKind, MaterialQuantity, Parameters, RefineryData, RefineryReport};
use refinery_solver::SolutionStatus;
use tabled::settings::Style;
use tabled::{Table, Tabled};

const CHART_WIDTH: usize = 40;

#[derive(Tabled)]
struct ProfitRow {
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "Profit per Barrel")]
    profit: String,
}

#[derive(Tabled)]
struct LimitRow {
    #[tabled(rename = "Constraint")]
    constraint: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct MaterialRow {
    #[tabled(rename = "Material")]
    material: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Quantity")]
    quantity: String,
}

#[derive(Tabled)]
struct ProductRow {
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "Barrels")]
    quantity: String,
    #[tabled(rename = "Profit")]
    profit: String,
}

#[derive(Tabled)]
struct FlowRow {
    #[tabled(rename = "From")]
    source: String,
    #[tabled(rename = "To")]
    destination: String,
    #[tabled(rename = "Flow")]
    flow: String,
}

#[derive(Tabled)]
struct SlackRow {
    #[tabled(rename = "Constraint")]
    constraint: String,
    #[tabled(rename = "Activity")]
    activity: String,
    #[tabled(rename = "Limit")]
    rhs: String,
    #[tabled(rename = "Slack")]
    slack: String,
    #[tabled(rename = "Binding")]
    binding: &'static str,
}

fn table<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn kind_label(kind: MaterialKind) -> &'static str {
    match kind {
        MaterialKind::Crude => "crude",
        MaterialKind::Distillate => "distillate",
        MaterialKind::Reformed => "reformed",
        MaterialKind::Cracked => "cracked",
        MaterialKind::Product => "product",
    }
}

/// Final products, limits, capacities and raw materials
pub fn data_tables(data: &RefineryData, params: &Parameters) -> String {
    let mut out = String::new();

    let profits = data.final_products.iter().map(|p| ProfitRow {
        product: p.clone(),
        profit: format!("{:.2}", data.product_profit.get(p).copied().unwrap_or(0.0)),
    });
    let _ = writeln!(out, "Final Products & Profits");
    let _ = writeln!(out, "{}\n", table(profits));

    let mut limits: Vec<LimitRow> = data
        .raw_materials
        .iter()
        .map(|crude| LimitRow {
            constraint: format!("Max {}", crude),
            value: format!("{:.0}", params.max_crude(crude).unwrap_or(0.0)),
        })
        .collect();
    limits.push(LimitRow {
        constraint: "Min Lube Oil".to_string(),
        value: format!("{:.0}", params.min_lube_oil),
    });
    limits.push(LimitRow {
        constraint: "Max Lube Oil".to_string(),
        value: format!("{:.0}", params.max_lube_oil),
    });
    let _ = writeln!(out, "Crude & Lube Oil Limits");
    let _ = writeln!(out, "{}\n", table(limits));

    let capacities = [
        ("Max Distillation Capacity", params.max_distillation),
        ("Max Naphtha Reforming", params.max_reforming),
        ("Max Oil Cracking", params.max_cracking),
    ]
    .into_iter()
    .map(|(name, value)| LimitRow {
        constraint: name.to_string(),
        value: format!("{:.0}", value),
    });
    let _ = writeln!(out, "Operational Constraints (barrels/day)");
    let _ = writeln!(out, "{}\n", table(capacities));

    let _ = writeln!(out, "Raw Materials");
    for crude in &data.raw_materials {
        let _ = writeln!(out, "  {}", crude);
    }
    out
}

/// Horizontal bar chart of material quantities
pub fn bar_chart(materials: &[MaterialQuantity], width: usize) -> String {
    let max = materials.iter().map(|m| m.quantity).fold(0.0, f64::max);
    let label_width = materials.iter().map(|m| m.material.len()).max().unwrap_or(0);

    let mut out = String::new();
    for m in materials {
        let len = if max > 0.0 {
            ((m.quantity / max) * width as f64).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{:<label_width$} │{} {:.2}",
            m.material,
            "█".repeat(len.max(1)),
            m.quantity
        );
    }
    out
}

pub fn report(report: &RefineryReport, chart: bool) -> String {
    let mut out = String::new();

    let status = match report.status {
        SolutionStatus::Optimal => "OPTIMAL",
        SolutionStatus::Infeasible => "INFEASIBLE",
        SolutionStatus::Unbounded => "UNBOUNDED",
        SolutionStatus::TimeLimit => "TIME LIMIT",
        SolutionStatus::Error => "ERROR",
    };
    let _ = writeln!(out, "Status: {}", status);

    let Some(profit) = report.profit else {
        let _ = writeln!(out, "No optimal solution found!");
        if !report.violations.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Violated requirements:");
            for v in &report.violations {
                let _ = writeln!(out, "  - {}", v.description);
            }
        }
        return out;
    };

    let _ = writeln!(out, "Total profit: {:.2}", profit);
    let _ = writeln!(out);

    let materials = report.materials.iter().map(|m| MaterialRow {
        material: m.material.clone(),
        kind: kind_label(m.kind),
        quantity: format!("{:.2}", m.quantity),
    });
    let _ = writeln!(out, "Refinery Output (barrels/day)");
    let _ = writeln!(out, "{}\n", table(materials));

    if chart && !report.materials.is_empty() {
        let _ = writeln!(out, "{}", bar_chart(&report.materials, CHART_WIDTH));
    }

    let products = report.products.iter().map(|p| ProductRow {
        product: p.product.clone(),
        quantity: format!("{:.2}", p.quantity),
        profit: format!("{:.2}", p.profit),
    });
    let _ = writeln!(out, "Profit by Product");
    let _ = writeln!(out, "{}\n", table(products));

    let flows = report.streams.iter().map(|s| FlowRow {
        source: s.source.clone(),
        destination: s.destination.clone(),
        flow: format!("{:.2}", s.flow),
    });
    let _ = writeln!(out, "Stream Flows");
    let _ = writeln!(out, "{}", table(flows));

    if !report.slacks.is_empty() {
        let slacks = report.slacks.iter().map(|s| SlackRow {
            constraint: s.constraint.clone(),
            activity: format!("{:.2}", s.activity),
            rhs: format!("{:.2}", s.rhs),
            slack: format!("{:.2}", s.slack),
            binding: if report.is_binding(&s.constraint) { "yes" } else { "" },
        });
        let _ = writeln!(out);
        let _ = writeln!(out, "Constraint Slack");
        let _ = writeln!(out, "{}", table(slacks));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantity(material: &str, quantity: f64) -> MaterialQuantity {
        MaterialQuantity {
            material: material.to_string(),
            kind: MaterialKind::Product,
            quantity,
        }
    }

    #[test]
    fn test_bar_chart_scales_to_largest() {
        let chart = bar_chart(&[quantity("JetFuel", 100.0), quantity("LubeOil", 25.0)], 8);
        let lines: Vec<&str> = chart.lines().collect();

        assert_eq!(lines[0], "JetFuel │████████ 100.00");
        assert_eq!(lines[1], "LubeOil │██ 25.00");
    }

    #[test]
    fn test_bar_chart_empty() {
        assert_eq!(bar_chart(&[], 10), "");
    }

    #[test]
    fn test_data_tables_lists_limits() {
        let data = RefineryData::bundled().unwrap();
        let text = data_tables(&data, &data.limits);

        assert!(text.contains("PremiumPetrol"));
        assert!(text.contains("Max CrudeOil1"));
        assert!(text.contains("Max Oil Cracking"));
        assert!(text.contains("45000"));
    }
}
