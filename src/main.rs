use anyhow::Context;
use machine_learner::ControllerConfig;

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ControllerConfig::from_env().context("reading configuration")?;
    log::info!("starting controller on {}", config.addr());

    machine_learner::serve(config)
        .await
        .context("running the controller")?;

    Ok(())
}
