use anyhow::bail;
use burn::backend::NdArray;
use burn::prelude::{Config, Module};
use clap::Parser;
use resnet_factory::models::resnet::{
    PREFAB_RESNET_MAP, ResNet, ResNetContractConfig, ResnetFactory,
};
use resnet_factory::utility::record::parameter_shapes;
use tracing_subscriber::EnvFilter;

// $ RUST_LOG=debug resnet_summary --depth=34 --input-shape=3,96,96 --num-classes=10
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Named prefab; see `--list`.
    #[arg(long, conflicts_with = "depth")]
    prefab: Option<String>,

    /// Factory variant depth: 18, 34, 50, 101 or 152.
    #[arg(long, default_value = "18")]
    depth: usize,

    /// Image shape ``channels,height,width``.
    #[arg(long, value_delimiter = ',', default_value = "3,224,224")]
    input_shape: Vec<usize>,

    /// Number of classes.
    #[arg(long, default_value_t = 1000)]
    num_classes: usize,

    /// List the prefabs and exit.
    #[arg(long)]
    list: bool,

    /// Write the structure config JSON here.
    #[arg(long)]
    config_out: Option<String>,

    /// Write the parameter shape JSON here.
    #[arg(long)]
    shapes_out: Option<String>,
}

fn contract_config(args: &Args) -> anyhow::Result<ResNetContractConfig> {
    if let Some(name) = &args.prefab {
        return Ok(PREFAB_RESNET_MAP.try_lookup(name)?.new_config());
    }

    let input_shape: [usize; 3] = match args.input_shape.as_slice() {
        &[channels, height, width] => [channels, height, width],
        other => bail!("--input-shape expects channels,height,width; got {other:?}"),
    };
    ResnetFactory::get_original_depth(args.depth, input_shape, args.num_classes)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.list {
        for prefab in PREFAB_RESNET_MAP.items {
            println!("{:<12} {}", prefab.name, prefab.description);
        }
        return Ok(());
    }

    type B = NdArray<f32>;
    let device = Default::default();

    let contract = contract_config(&args)?;
    let structure = contract.try_to_structure()?;

    println!(
        "ResNet {} {:?} on {:?} -> {} classes",
        contract.unit_kind,
        contract.units_per_block,
        contract.input_shape,
        contract.num_classes
    );
    for row in structure.layer_summary() {
        println!("  {row}");
    }

    if let Some(path) = &args.config_out {
        structure.save(path)?;
        tracing::info!(path, "wrote structure config");
    }

    let model: ResNet<B> = structure.try_init(&device)?;
    let num_params = model.num_params();
    tracing::info!(num_params, "initialized model");
    println!("parameters: {num_params}");

    if let Some(path) = &args.shapes_out {
        let shapes = parameter_shapes::<B, _>(model.into_record())?;
        std::fs::write(path, serde_json::to_string_pretty(&shapes)?)?;
        tracing::info!(path, "wrote parameter shapes");
    }

    Ok(())
}
