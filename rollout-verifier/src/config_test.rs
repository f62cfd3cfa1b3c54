use anyhow::Result;

use crate::config::Config;

#[test]
fn config_deserializes_from_full_env() -> Result<()> {
    let config: Config = envy::from_iter(vec![
        ("MCO_NAMESPACE".into(), "mco".into()),
        ("CONTROLLER_POD_SELECTOR".into(), "app=controller".into()),
        ("EVENTS_NAMESPACE".into(), "events".into()),
        ("POLL_INTERVAL_SECONDS".into(), "5".into()),
        ("NODE_BUDGET_SECONDS".into(), "300".into()),
        ("API_TIMEOUT_SECONDS".into(), "3".into()),
    ])?;
    config.validate()?;

    assert!(config.mco_namespace == "mco", "unexpected value parsed for MCO_NAMESPACE, got {}, expected {}", config.mco_namespace, "mco");
    assert!(
        config.controller_pod_selector == "app=controller",
        "unexpected value parsed for CONTROLLER_POD_SELECTOR, got {}, expected {}",
        config.controller_pod_selector,
        "app=controller"
    );
    assert!(
        config.events_namespace == "events",
        "unexpected value parsed for EVENTS_NAMESPACE, got {}, expected {}",
        config.events_namespace,
        "events"
    );
    assert!(config.poll_interval_seconds == 5, "unexpected value parsed for POLL_INTERVAL_SECONDS, got {}, expected {}", config.poll_interval_seconds, 5);
    assert!(config.node_budget_seconds == 300, "unexpected value parsed for NODE_BUDGET_SECONDS, got {}, expected {}", config.node_budget_seconds, 300);
    assert!(config.api_timeout_seconds == 3, "unexpected value parsed for API_TIMEOUT_SECONDS, got {}, expected {}", config.api_timeout_seconds, 3);

    Ok(())
}

#[test]
fn config_deserializes_from_sparse_env() -> Result<()> {
    let config: Config = envy::from_iter(Vec::<(String, String)>::new())?;
    config.validate()?;

    assert!(
        config.mco_namespace == "openshift-machine-config-operator",
        "unexpected default for MCO_NAMESPACE, got {}",
        config.mco_namespace
    );
    assert!(
        config.controller_pod_selector == "k8s-app=machine-config-controller",
        "unexpected default for CONTROLLER_POD_SELECTOR, got {}",
        config.controller_pod_selector
    );
    assert!(config.events_namespace == "default", "unexpected default for EVENTS_NAMESPACE, got {}", config.events_namespace);
    assert!(config.poll_interval_seconds == 10, "unexpected default for POLL_INTERVAL_SECONDS, got {}", config.poll_interval_seconds);
    assert!(config.node_budget_seconds == 600, "unexpected default for NODE_BUDGET_SECONDS, got {}", config.node_budget_seconds);

    Ok(())
}

#[test]
fn config_rejects_budget_below_interval() -> Result<()> {
    let config: Config = envy::from_iter(vec![
        ("POLL_INTERVAL_SECONDS".into(), "30".into()),
        ("NODE_BUDGET_SECONDS".into(), "10".into()),
    ])?;

    let res = config.validate();

    assert!(res.is_err(), "expected a node budget below the poll interval to be rejected");
    Ok(())
}
