//! Routing rule file emitters.
//!
//! Two BIRD flavors exist: one `route <CIDR> via "<iface>";` line per
//! CIDR, or a `define <NAME> = [ ... ];` set. The mainland list is a
//! plain one-CIDR-per-line file. All three carry a comment banner with
//! the entry count so a human can sanity-check a generated file.

use ipnet::IpNet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::range::AddressFamily;
use crate::Result;

/// Which BIRD syntax to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BirdFlavor {
    /// `route <CIDR> via "<iface>";` per entry
    Route { iface: String },
    /// `define <NAME> = [ <CIDR>, ... ];`
    Define { name: String },
}

impl BirdFlavor {
    /// Conventional set name for the define flavor.
    pub fn define_for(family: AddressFamily) -> Self {
        let name = match family {
            AddressFamily::V4 => "NON_CN_IPV4",
            AddressFamily::V6 => "NON_CN_IPV6",
        };
        BirdFlavor::Define {
            name: name.to_string(),
        }
    }
}

/// Write a non-mainland BIRD config.
pub fn write_bird_config<W: Write>(
    w: &mut W,
    cidrs: &[IpNet],
    family: AddressFamily,
    flavor: &BirdFlavor,
) -> io::Result<()> {
    writeln!(
        w,
        "# Non-mainland-China {family} routes (reserved space excluded)"
    )?;
    writeln!(w, "# {} entries", cidrs.len())?;
    writeln!(w)?;

    if cidrs.is_empty() {
        writeln!(w, "# no entries")?;
        return Ok(());
    }

    match flavor {
        BirdFlavor::Route { iface } => {
            for cidr in cidrs {
                writeln!(w, "route {cidr} via \"{iface}\";")?;
            }
        }
        BirdFlavor::Define { name } => {
            writeln!(w, "define {name} = [")?;
            for (i, cidr) in cidrs.iter().enumerate() {
                if i + 1 == cidrs.len() {
                    writeln!(w, "    {cidr}")?;
                } else {
                    writeln!(w, "    {cidr},")?;
                }
            }
            writeln!(w, "];")?;
        }
    }

    Ok(())
}

/// Write the mainland CIDR list.
pub fn write_mainland_routes<W: Write>(
    w: &mut W,
    cidrs: &[IpNet],
    family: AddressFamily,
) -> io::Result<()> {
    writeln!(w, "# Mainland China {family} CIDR list")?;
    writeln!(w, "# Reserved space excluded, adjacent blocks merged")?;
    writeln!(w, "# {} entries", cidrs.len())?;
    writeln!(w)?;

    for cidr in cidrs {
        writeln!(w, "{cidr}")?;
    }

    Ok(())
}

/// Write a non-mainland BIRD config to a file.
pub fn save_bird_config(
    path: &Path,
    cidrs: &[IpNet],
    family: AddressFamily,
    flavor: &BirdFlavor,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_bird_config(&mut writer, cidrs, family, flavor)?;
    writer.flush()?;
    Ok(())
}

/// Write a mainland CIDR list to a file.
pub fn save_mainland_routes(path: &Path, cidrs: &[IpNet], family: AddressFamily) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_mainland_routes(&mut writer, cidrs, family)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nets(strs: &[&str]) -> Vec<IpNet> {
        strs.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_route_flavor() {
        let mut buf = Vec::new();
        let flavor = BirdFlavor::Route {
            iface: "wg0".to_string(),
        };
        write_bird_config(
            &mut buf,
            &nets(&["8.0.0.0/7", "11.0.0.0/8"]),
            AddressFamily::V4,
            &flavor,
        )
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("# 2 entries"));
        assert!(text.contains("route 8.0.0.0/7 via \"wg0\";"));
        assert!(text.contains("route 11.0.0.0/8 via \"wg0\";"));
    }

    #[test]
    fn test_define_flavor_comma_placement() {
        let mut buf = Vec::new();
        write_bird_config(
            &mut buf,
            &nets(&["8.0.0.0/7", "11.0.0.0/8"]),
            AddressFamily::V4,
            &BirdFlavor::define_for(AddressFamily::V4),
        )
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("define NON_CN_IPV4 = ["));
        assert!(text.contains("    8.0.0.0/7,\n"));
        // Last entry has no trailing comma
        assert!(text.contains("    11.0.0.0/8\n];"));
    }

    #[test]
    fn test_empty_config() {
        let mut buf = Vec::new();
        write_bird_config(
            &mut buf,
            &[],
            AddressFamily::V6,
            &BirdFlavor::define_for(AddressFamily::V6),
        )
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("# no entries"));
        assert!(!text.contains("define"));
    }

    #[test]
    fn test_mainland_list() {
        let mut buf = Vec::new();
        write_mainland_routes(
            &mut buf,
            &nets(&["1.0.0.0/24", "1.0.4.0/22"]),
            AddressFamily::V4,
        )
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("# Mainland China IPv4 CIDR list"));
        assert!(text.contains("# 2 entries"));
        assert!(text.ends_with("1.0.0.0/24\n1.0.4.0/22\n"));
    }
}
