use crate::cli::SliceArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use anyhow::Context;
use normal_mode_analysis::core::geometry::cross_section::Contour;
use normal_mode_analysis::engine::progress::ProgressReporter;
use normal_mode_analysis::workflows::mean_mesh;
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct ContourPointRecord {
    contour: usize,
    closed: bool,
    x: f64,
    y: f64,
    z: f64,
}

/// Writes one CSV row per contour point; contours are numbered across all planes.
fn write_contours<W: Write>(
    sections: &[(f64, Vec<Contour>)],
    writer: &mut csv::Writer<W>,
) -> anyhow::Result<usize> {
    let contours = sections.iter().flat_map(|(_, contours)| contours);
    let mut count = 0;
    for (index, contour) in contours.enumerate() {
        for point in &contour.points {
            writer.serialize(ContourPointRecord {
                contour: index,
                closed: contour.is_closed,
                x: point.x,
                y: point.y,
                z: point.z,
            })?;
        }
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

pub fn run(args: SliceArgs) -> Result<()> {
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.callback());

    info!(
        "Cutting {:?} at {} plane(s).",
        &args.input,
        args.z_values.len()
    );
    let sections = mean_mesh::slice_file(&args.input, &args.z_values, &reporter)?;

    for (z, contours) in &sections {
        if contours.is_empty() {
            warn!("Plane z = {} does not intersect the mesh.", z);
        }
        if contours.iter().any(|c| !c.is_closed) {
            warn!("Plane z = {} produced open contours.", z);
        }
    }

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let count = write_contours(&sections, &mut writer)
        .with_context(|| format!("Failed to write contours to {}", args.output.display()))?;

    println!(
        "✓ {} contour(s) written to: {}",
        count,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::commands::test_meshes::write_cube_vtk;
    use clap::Parser;
    use nalgebra::Point3;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn contour_points_are_written_with_header() {
        let sections = vec![
            (
                0.0,
                vec![Contour {
                    points: vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
                    is_closed: false,
                }],
            ),
            (5.0, Vec::new()),
            (
                1.0,
                vec![Contour {
                    points: vec![Point3::new(2.0, 3.0, 1.0)],
                    is_closed: true,
                }],
            ),
        ];
        let mut writer = csv::Writer::from_writer(Vec::new());
        let count = write_contours(&sections, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            text,
            "contour,closed,x,y,z\n0,false,0.0,0.0,0.0\n0,false,1.0,0.0,0.0\n1,true,2.0,3.0,1.0\n"
        );
    }

    #[test]
    fn slices_mesh_file_into_csv() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("cube.vtk");
        let output = dir.path().join("contours.csv");
        write_cube_vtk(&input, 1.0);

        let cli = Cli::parse_from([
            "nma",
            "slice",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--at",
            "-0.5",
            "0.5",
            "3.0",
        ]);
        let Commands::Slice(args) = cli.command else {
            panic!("Expected 'slice' subcommand");
        };
        assert_eq!(args.z_values, vec![-0.5, 0.5, 3.0]);
        run(args).unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert!(!rows.is_empty());
        let contour_ids: std::collections::BTreeSet<&str> =
            rows.iter().map(|r| r.get(0).unwrap()).collect();
        assert_eq!(contour_ids.len(), 2);
        assert!(rows.iter().all(|r| r.get(1) == Some("true")));
        assert!(fs::read_to_string(&output).unwrap().starts_with("contour,closed,x,y,z"));
    }
}
