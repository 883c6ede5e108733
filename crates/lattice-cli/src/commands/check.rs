use std::path::Path;

use lattice_check::Check;

use super::load;

pub fn check(file: &Path, config: Option<&Path>, resource: &str, format: &str) -> anyhow::Result<()> {
    let (definition, cluster) = load(file, config)?;
    let info = definition.editable(&cluster, resource)?;
    let check = cluster.check(&info);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&check)?);
        }
        _ => {
            println!("{}", format_check(&info.subject(&cluster), &check));
        }
    }

    Ok(())
}

fn format_check(subject: &str, check: &Check) -> String {
    let verdict = match (check.is_correct(), check.has_changes()) {
        (false, _) => "incorrect",
        (true, true) => "ready to commit",
        (true, false) => "unchanged",
    };
    let mut out = format!("{subject}: {verdict}");
    for name in &check.incorrect {
        match check.violation(name) {
            Some(violation) => out.push_str(&format!("\n  ✗ {name}: {violation}")),
            None => out.push_str(&format!("\n  ✗ {name}")),
        }
    }
    for change in &check.changed {
        out.push_str(&format!("\n  ~ {change}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_check::Violation;

    #[test]
    fn test_format_lists_incorrect_then_changed() {
        let mut check = Check::new(false);
        check.add_incorrect("protocol", Violation::NotAChoice);
        check.add_changed("protocol", "C", "D");
        assert_eq!(
            format_check("volume resource r0", &check),
            "volume resource r0: incorrect\n  ✗ protocol: not one of the allowed choices\n  ~ protocol: \"C\" -> \"D\""
        );
    }

    #[test]
    fn test_format_unchanged() {
        assert_eq!(format_check("service web", &Check::new(false)), "service web: unchanged");
        assert_eq!(format_check("service ip", &Check::new(true)), "service ip: ready to commit");
    }
}
