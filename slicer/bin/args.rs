use std::{any::Any, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use clap::{ArgMatches, Parser};
use nalgebra::{ArrayStorage, Const, Matrix, Scalar, Vector3, U1};
use num_traits::Zero;

#[derive(Debug, Parser)]
/// Plans toolpaths for a fused filament printer and writes them as gcode.
pub struct Args {
    #[arg(long)]
    /// Print config in TOML. Defaults are used when not given.
    pub config: Option<PathBuf>,

    #[arg(long)]
    /// Describe every command in a trailing comment.
    pub verbose_gcode: bool,

    #[command(flatten)]
    pub model: ModelArgs,

    /// File to save the gcode to.
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
#[group(required = true)]
pub struct ModelArgs {
    #[arg(long)]
    /// Path to a .stl or .obj file
    pub mesh: Vec<PathBuf>,

    #[arg(long, value_parser = vector_value_parser::<f64, 3>)]
    /// Location of the bottom center of the model's bounding box on the
    /// print bed, in mm.
    pub position: Vec<Vector3<f64>>,

    #[arg(long, value_parser = vector_value_parser::<f64, 3>)]
    /// Rotation of the model in degrees about the X, Y, and Z axes.
    pub rotation: Vec<Vector3<f64>>,
}

#[derive(Debug)]
pub struct Model {
    pub path: PathBuf,
    pub position: Vector3<f64>,
    pub rotation: Vector3<f64>,
}

impl Model {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Pairs every `--position` and `--rotation` with the `--mesh` given
    /// before it.
    pub fn from_matches(matches: &ArgMatches) -> Result<Vec<Self>> {
        let meshes = matches
            .get_many::<PathBuf>("mesh")
            .context("No meshes defined")?;
        let indices = matches.indices_of("mesh").context("No meshes defined")?;
        let mut meshes = meshes
            .zip(indices)
            .map(|x| (x.1, Model::new(x.0.to_owned())))
            .collect::<Vec<_>>();

        fn model_parameter<T: Any + Clone + Send + Sync + 'static>(
            matches: &ArgMatches,
            meshes: &mut [(usize, Model)],
            key: &str,
            value: impl Fn(&mut Model) -> &mut T,
        ) -> Result<()> {
            let (Some(instances), Some(indices)) =
                (matches.get_many::<T>(key), matches.indices_of(key))
            else {
                return Ok(());
            };

            for (instance, idx) in instances.zip(indices) {
                let mesh = meshes
                    .iter_mut()
                    .rfind(|x| idx > x.0)
                    .with_context(|| format!("--{key} given before any --mesh"))?;
                *value(&mut mesh.1) = instance.to_owned();
            }
            Ok(())
        }

        model_parameter(matches, &mut meshes, "rotation", |mesh| &mut mesh.rotation)?;
        model_parameter(matches, &mut meshes, "position", |mesh| &mut mesh.position)?;

        Ok(meshes.into_iter().map(|x| x.1).collect())
    }
}

impl Default for Model {
    fn default() -> Self {
        Self {
            path: PathBuf::default(),
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
        }
    }
}

fn vector_value_parser<T, const N: usize>(
    raw: &str,
) -> Result<Matrix<T, Const<N>, U1, ArrayStorage<T, N, 1>>>
where
    T: FromStr + Scalar + Zero,
    T::Err: Send + Sync + std::error::Error,
{
    let mut vec = Matrix::<T, Const<N>, U1, ArrayStorage<T, N, 1>>::zeros();

    let mut parts = raw.splitn(N, ',');
    for i in 0..N {
        let element = parts.next().context("Missing vector element")?.trim();
        vec[i] = element
            .parse()
            .context("Can't convert element from string")?;
    }

    Ok(vec)
}
