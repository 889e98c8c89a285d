use crate::cli::InfoArgs;
use crate::error::Result;
use normal_mode_analysis::core::models::mesh::MeshSummary;
use normal_mode_analysis::workflows::mean_mesh;
use std::fmt::Write;
use tracing::info;

fn format_summary(summary: &MeshSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Vertices:      {}", summary.vertex_count);
    let _ = writeln!(out, "  Faces:         {}", summary.face_count);
    match &summary.bounding_box {
        Some(bbox) => {
            let extent = bbox.extent();
            let _ = writeln!(
                out,
                "  Bounding box:  [{:.3}, {:.3}, {:.3}] .. [{:.3}, {:.3}, {:.3}]",
                bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z
            );
            let _ = writeln!(
                out,
                "  Extent:        {:.3} x {:.3} x {:.3}",
                extent.x, extent.y, extent.z
            );
        }
        None => {
            let _ = writeln!(out, "  Bounding box:  (empty mesh)");
        }
    }
    let _ = writeln!(out, "  Surface area:  {:.3}", summary.surface_area);
    let _ = writeln!(out, "  Volume:        {:.3}", summary.volume);
    out
}

pub fn run(args: InfoArgs) -> Result<()> {
    info!("Loading mesh from {:?}", &args.input);
    let mesh = mean_mesh::load_mesh(&args.input)?;
    let summary = mesh.summary();
    println!("{}", args.input.display());
    print!("{}", format_summary(&summary));
    if summary.volume < 0.0 {
        println!("  Note: negative volume, the faces are wound inward.");
    }
    Ok(())
}
