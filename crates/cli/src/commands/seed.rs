use super::{open, print_rollback, print_run, report, FilterArgs, Target};
use tessera_orm::MigrationOptions;

pub async fn up(target: &Target, filter: &FilterArgs) -> anyhow::Result<()> {
    let session = open(target).await?;
    let result = session
        .migrator
        .seed_up(&filter.options())
        .await
        .map_err(report)?;
    print_run(&result, "seeded");
    session.close().await
}

pub async fn down(target: &Target, filter: &FilterArgs, batch: Option<i64>) -> anyhow::Result<()> {
    let session = open(target).await?;
    let options = MigrationOptions {
        batch,
        ..filter.options()
    };
    let result = session
        .migrator
        .seed_down(&options)
        .await
        .map_err(report)?;
    print_rollback(&result);
    session.close().await
}
