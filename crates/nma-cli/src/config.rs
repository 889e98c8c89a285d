pub mod defaults;

use crate::cli::MeanMeshArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use defaults::DefaultsConfig;
use normal_mode_analysis::core::geometry::voxelize::VoxelizationMethod;
use normal_mode_analysis::core::io::stl::StlFormat;
use normal_mode_analysis::engine::config as core_config;
use serde::Deserialize;
use serde::de::{DeserializeOwned, IntoDeserializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialDatasetConfig {
    manifest: Option<PathBuf>,
    mesh_dir: Option<PathBuf>,
    id_column: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialGridConfig {
    dims: Option<[usize; 3]>,
    z_spacing: Option<f64>,
    z_extent: Option<f64>,
    center: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialVoxelizationConfig {
    method: Option<VoxelizationMethod>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSurfaceConfig {
    level: Option<f32>,
    step_size: Option<usize>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialZRescale {
    z_spacing: f64,
    extent: f64,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialOutputConfig {
    mesh: Option<PathBuf>,
    mask: Option<PathBuf>,
    stl_format: Option<StlFormat>,
    rescale_z: Option<PartialZRescale>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialMeanMeshConfig {
    #[serde(default)]
    dataset: PartialDatasetConfig,
    #[serde(default)]
    grid: PartialGridConfig,
    #[serde(default)]
    voxelization: PartialVoxelizationConfig,
    #[serde(default)]
    surface: PartialSurfaceConfig,
    #[serde(default)]
    output: PartialOutputConfig,
}

impl PartialMeanMeshConfig {
    /// Loads a config file. Relative paths inside it are taken relative to the file itself.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

        let base_dir = path.parent().unwrap_or(Path::new(""));
        for slot in [
            &mut config.dataset.manifest,
            &mut config.dataset.mesh_dir,
            &mut config.output.mesh,
            &mut config.output.mask,
        ] {
            if let Some(p) = slot.as_mut().filter(|p| p.is_relative()) {
                *p = base_dir.join(&*p);
            }
        }
        Ok(config)
    }

    pub fn merge_with_cli(mut self, args: &MeanMeshArgs) -> Result<core_config::MeanMeshConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let manifest = args
            .manifest
            .clone()
            .or(self.dataset.manifest)
            .ok_or_else(|| {
                CliError::Config(
                    "A dataset manifest is required (`--manifest` or `dataset.manifest`)."
                        .to_string(),
                )
            })?;
        let mesh_dir = args
            .mesh_dir
            .clone()
            .or(self.dataset.mesh_dir)
            .ok_or_else(|| {
                CliError::Config(
                    "A mesh directory is required (`--mesh-dir` or `dataset.mesh-dir`)."
                        .to_string(),
                )
            })?;

        let method = args
            .grid
            .method
            .map(VoxelizationMethod::from)
            .or(self.voxelization.method)
            .unwrap_or(defaults.method);
        let center = if args.grid.no_center {
            false
        } else {
            self.grid.center.unwrap_or(defaults.center)
        };
        let stl_format = if args.ascii {
            StlFormat::Ascii
        } else {
            self.output.stl_format.unwrap_or(defaults.stl_format)
        };
        let z_rescale = args
            .rescale_z
            .map(|(z_spacing, extent)| PartialZRescale { z_spacing, extent })
            .or(self.output.rescale_z)
            .map(|r| core_config::ZRescale {
                z_spacing: r.z_spacing,
                extent: r.extent,
            });

        core_config::MeanMeshConfigBuilder::new()
            .manifest_path(manifest)
            .mesh_dir(mesh_dir)
            .id_column(
                args.id_column
                    .clone()
                    .or(self.dataset.id_column)
                    .unwrap_or(defaults.id_column),
            )
            .limit(args.limit.or(self.dataset.limit))
            .dims(args.grid.dims.or(self.grid.dims).unwrap_or(defaults.dims))
            .z_spacing(
                args.grid
                    .z_spacing
                    .or(self.grid.z_spacing)
                    .unwrap_or(defaults.z_spacing),
            )
            .z_extent(args.grid.z_extent.or(self.grid.z_extent))
            .center_on_grid(center)
            .method(method)
            .level(args.level.or(self.surface.level).unwrap_or(defaults.level))
            .step_size(
                args.step_size
                    .or(self.surface.step_size)
                    .unwrap_or(defaults.step_size),
            )
            .mesh_path(
                args.output
                    .clone()
                    .or(self.output.mesh)
                    .unwrap_or(defaults.mesh_output),
            )
            .mask_path(args.mask_output.clone().or(self.output.mask))
            .stl_format(stl_format)
            .z_rescale(z_rescale)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "dataset.manifest" => self.dataset.manifest = Some(PathBuf::from(value)),
                "dataset.mesh-dir" => self.dataset.mesh_dir = Some(PathBuf::from(value)),
                "dataset.id-column" => self.dataset.id_column = Some(value.to_string()),
                "dataset.limit" => self.dataset.limit = Some(parse_number(key, value)?),
                "grid.dims" => {
                    self.grid.dims = Some(
                        parser::parse_dims(value).map_err(|e| CliError::Config(e.to_string()))?,
                    )
                }
                "grid.z-spacing" => self.grid.z_spacing = Some(parse_number(key, value)?),
                "grid.z-extent" => self.grid.z_extent = Some(parse_number(key, value)?),
                "grid.center" => self.grid.center = Some(parse_number(key, value)?),
                "voxelization.method" => {
                    self.voxelization.method = Some(parse_keyword(key, value)?)
                }
                "surface.level" => self.surface.level = Some(parse_number(key, value)?),
                "surface.step-size" => self.surface.step_size = Some(parse_number(key, value)?),
                "output.mesh" => self.output.mesh = Some(PathBuf::from(value)),
                "output.mask" => self.output.mask = Some(PathBuf::from(value)),
                "output.stl-format" => self.output.stl_format = Some(parse_keyword(key, value)?),
                "output.rescale-z" => {
                    let (z_spacing, extent) = parser::parse_rescale(value)
                        .map_err(|e| CliError::Config(e.to_string()))?;
                    self.output.rescale_z = Some(PartialZRescale { z_spacing, extent });
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_keyword<T: DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    T::deserialize(value.into_deserializer()).map_err(|e: serde::de::value::Error| {
        CliError::Config(format!("Invalid value for {}: {}", key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("temp dir for config tests"));

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn mean_mesh_args(extra: &[&str]) -> MeanMeshArgs {
        let args = ["nma", "mean-mesh"].iter().chain(extra).copied();
        match Cli::parse_from(args).command {
            Commands::MeanMesh(args) => args,
            other => panic!("Expected 'mean-mesh' subcommand, got {other:?}"),
        }
    }

    fn load(name: &str, content: &str) -> PartialMeanMeshConfig {
        PartialMeanMeshConfig::from_file(&write_config_file(name, content)).unwrap()
    }

    #[test]
    fn file_values_are_used_and_defaults_fill_the_rest() {
        let partial = load(
            "minimal.toml",
            r#"
            [dataset]
            manifest = "cells.csv"
            mesh-dir = "/data/meshes"

            [grid]
            dims = [64, 64, 32]
            z-spacing = 0.29
            "#,
        );
        let config = partial.merge_with_cli(&mean_mesh_args(&[])).unwrap();

        assert_eq!(config.dataset.manifest_path, TEST_DIR.path().join("cells.csv"));
        assert_eq!(config.dataset.mesh_dir, PathBuf::from("/data/meshes"));
        assert_eq!(config.dataset.id_column, "CellId");
        assert_eq!(config.grid.dims, [64, 64, 32]);
        assert!((config.grid.spacing.z - 0.29).abs() < 1e-12);
        assert!(config.voxelization.center_on_grid);
        assert_eq!(config.voxelization.method, VoxelizationMethod::RayParity);
        assert_eq!(config.surface.level, 0.5);
        assert_eq!(config.surface.step_size, 1);
        assert_eq!(config.output.mesh_path, PathBuf::from("mean_nuc_mesh.stl"));
        assert_eq!(config.output.stl_format, StlFormat::Binary);
        assert!(config.output.z_rescale.is_none());
    }

    #[test]
    fn cli_args_override_file_values() {
        let partial = load(
            "override.toml",
            r#"
            [dataset]
            manifest = "/data/cells.csv"
            mesh-dir = "/data/meshes"
            limit = 5

            [voxelization]
            method = "ray-parity"

            [surface]
            level = 0.3

            [output]
            mesh = "/out/mean.stl"
            stl-format = "binary"
            rescale-z = { z-spacing = 0.29, extent = 20.0 }
            "#,
        );
        let args = mean_mesh_args(&[
            "--limit",
            "50",
            "--method",
            "cross-section",
            "--no-center",
            "--level",
            "0.6",
            "--ascii",
            "-o",
            "/elsewhere/mean.stl",
            "--rescale-z",
            "0.5,10",
            "--dims",
            "40",
        ]);
        let config = partial.merge_with_cli(&args).unwrap();

        assert_eq!(config.dataset.limit, Some(50));
        assert_eq!(config.voxelization.method, VoxelizationMethod::CrossSection);
        assert!(!config.voxelization.center_on_grid);
        assert_eq!(config.surface.level, 0.6);
        assert_eq!(config.output.stl_format, StlFormat::Ascii);
        assert_eq!(config.output.mesh_path, PathBuf::from("/elsewhere/mean.stl"));
        assert_eq!(config.grid.dims, [40, 40, 40]);
        assert_eq!(
            config.output.z_rescale,
            Some(core_config::ZRescale {
                z_spacing: 0.5,
                extent: 10.0
            })
        );
    }

    #[test]
    fn set_values_override_file_values() {
        let partial = load(
            "set.toml",
            r#"
            [dataset]
            manifest = "/data/cells.csv"
            mesh-dir = "/data/meshes"

            [surface]
            step-size = 1
            "#,
        );
        let args = mean_mesh_args(&[
            "-S",
            "surface.step-size=3",
            "-S",
            "voxelization.method=cross-section",
            "-S",
            "output.stl-format=ascii",
            "-S",
            "grid.dims=16,16,8",
            "-S",
            "grid.center=false",
            "-S",
            "grid.z-extent=4.0",
        ]);
        let config = partial.merge_with_cli(&args).unwrap();

        assert_eq!(config.surface.step_size, 3);
        assert_eq!(config.voxelization.method, VoxelizationMethod::CrossSection);
        assert_eq!(config.output.stl_format, StlFormat::Ascii);
        assert_eq!(config.grid.dims, [16, 16, 4]);
        assert!(!config.voxelization.center_on_grid);
    }

    #[test]
    fn config_file_is_optional_when_cli_names_the_dataset() {
        let args = mean_mesh_args(&["--manifest", "cells.csv", "--mesh-dir", "meshes"]);
        let config = PartialMeanMeshConfig::default()
            .merge_with_cli(&args)
            .unwrap();
        assert_eq!(config.dataset.manifest_path, PathBuf::from("cells.csv"));
        assert_eq!(config.grid.dims, [128, 128, 128]);
    }

    #[test]
    fn missing_dataset_is_a_config_error() {
        let result = PartialMeanMeshConfig::default().merge_with_cli(&mean_mesh_args(&[]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("manifest")));
    }

    #[test]
    fn invalid_values_are_reported() {
        let base = ["--manifest", "m.csv", "--mesh-dir", "d"];
        let cases: [&[&str]; 4] = [
            &["-S", "surface.level=high"],
            &["-S", "voxelization.method=marching"],
            &["-S", "unknown.key=1"],
            &["-S", "surface.level"],
        ];
        for extra in cases {
            let args: Vec<&str> = base.iter().chain(extra).copied().collect();
            let result = PartialMeanMeshConfig::default().merge_with_cli(&mean_mesh_args(&args));
            assert!(matches!(result, Err(CliError::Config(_))), "{extra:?}");
        }

        let zero_step = mean_mesh_args(&["--manifest", "m.csv", "--mesh-dir", "d", "--step-size", "0"]);
        assert!(matches!(
            PartialMeanMeshConfig::default().merge_with_cli(&zero_step),
            Err(CliError::Config(msg)) if msg.contains("step_size")
        ));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let path = write_config_file("unknown.toml", "[grid]\nresolution = 4\n");
        let result = PartialMeanMeshConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }
}
