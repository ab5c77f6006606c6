use inapp_updater_lib::updater::coordinator::{UpdateCoordinator, UpdateOutcome};
use inapp_updater_lib::updater::manager::{FlowResult, HostWindow, UpdateType};
use inapp_updater_lib::updater::sim::{ManagerCall, Scenario, SimUpdateManager};

#[tokio::test]
async fn update_cycle_from_scenario_file() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Script a store offering version code 43, with a little latency
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scenario.json");
    Scenario::available(43).with_latency_ms(10).save(&path)?;

    // 2. Boot the scripted store from the file
    let scenario = Scenario::load(&path)?;
    let coordinator = UpdateCoordinator::new(SimUpdateManager::new(scenario));
    let host = HostWindow::foreground("main-screen");

    // 3. Run the flexible cycle to its terminal outcome
    let outcome = coordinator
        .request_update(UpdateType::Flexible, &host)
        .await?;
    assert_eq!(
        outcome,
        UpdateOutcome::FlowFinished(FlowResult {
            update_type: UpdateType::Flexible,
            version_code: Some(43),
        })
    );

    // 4. Exactly one query and one flow start, in that order
    assert_eq!(
        coordinator.manager().calls(),
        vec![
            ManagerCall::UpdateInfo,
            ManagerCall::StartUpdateFlow(UpdateType::Flexible),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn quiet_store_keeps_the_cycle_a_noop() -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = UpdateCoordinator::new(SimUpdateManager::new(Scenario::default()));
    let host = HostWindow::foreground("main-screen");

    for _ in 0..2 {
        let outcome = coordinator
            .request_update(UpdateType::Immediate, &host)
            .await?;
        assert!(matches!(outcome, UpdateOutcome::NotAvailable(_)));
    }

    assert_eq!(
        coordinator.manager().calls(),
        vec![ManagerCall::UpdateInfo, ManagerCall::UpdateInfo]
    );

    Ok(())
}
