use std::path::Path;

use super::load;

pub fn volume(file: &Path, config: Option<&Path>, resource: &str) -> anyhow::Result<()> {
    let (_, cluster) = load(file, config)?;
    print!("{}", cluster.render_volume(resource)?);
    Ok(())
}

pub fn constraints(file: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let (_, cluster) = load(file, config)?;
    for line in cluster.synthesizer().render_constraints(cluster.graph())? {
        println!("{line}");
    }
    Ok(())
}
