#[actix_web::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tubely::TubelyConfiguration::build_default()?
        .install_tracing()?
        .install_metrics()?
        .run()
        .await
}
