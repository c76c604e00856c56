use std::{
    fs::File,
    io::{BufReader, BufWriter},
    time::Instant,
};

use anyhow::{Context, Result};
use args::{Args, Model};
use clap::{CommandFactory, FromArgMatches};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use common::{config::PrintConfig, misc::human_duration};
use gcode_format::{File as GcodeFile, WriteOptions};
use slicer::{
    mesh::load_mesh,
    pipeline::Pipeline,
    scene::{File as PrintFile, Object},
    transform::Placement,
};

mod args;

fn main() -> Result<()> {
    let filter = filter::Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target("slicer", LevelFilter::TRACE)
        .with_target("common", LevelFilter::TRACE)
        .with_target("gcode_format", LevelFilter::TRACE);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches)?;
    let models = Model::from_matches(&matches)?;

    let config = PrintConfig::load_or_default(args.config.as_deref())?;
    let pipeline = Pipeline::from_config(config)?;

    let name = args
        .output
        .file_stem()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut file = PrintFile::new(name);

    for (id, model) in models.iter().enumerate() {
        let ext = model
            .path
            .extension()
            .with_context(|| format!("`{}` has no file extension", model.path.display()))?
            .to_string_lossy();
        let buf = BufReader::new(
            File::open(&model.path)
                .with_context(|| format!("Failed to open `{}`", model.path.display()))?,
        );
        let mesh = load_mesh(buf, &ext)?;

        let file_name = model
            .path
            .file_name()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "Loaded `{file_name}`. {{ vert: {}, face: {} }}",
            mesh.vertex_count(),
            mesh.face_count()
        );

        let id = id as i64;
        file.add_object(Object::new(id, mesh).with_name(file_name));
        let placement = Placement::from_euler_degrees(model.position, &model.rotation);
        file.print_bed_mut().add_instance(id, placement);
    }

    let now = Instant::now();
    let result = pipeline.run(&mut file)?;

    let options = WriteOptions {
        verbose: args.verbose_gcode || pipeline.config().export.verbose,
        delete_comments: pipeline.config().export.delete_comments,
    };
    let mut out = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Failed to create `{}`", args.output.display()))?,
    );
    GcodeFile::new(result.instructions).serialize(&mut out, options)?;

    println!(
        "Planned {} layers. Filament: {:.1}mm, estimated print time: {}",
        result.layer_groups.len(),
        result.filament_used,
        human_duration(result.print_time)
    );
    println!("Done. Elapsed: {:.1}s", now.elapsed().as_secs_f32());

    Ok(())
}
