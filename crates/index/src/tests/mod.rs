mod support;
mod sync_scenarios;
