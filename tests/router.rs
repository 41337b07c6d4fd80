#[path = "support/mod.rs"]
mod support;

#[path = "router/add_company.rs"]
mod add_company;
#[path = "router/batch.rs"]
mod batch;
#[path = "router/gate.rs"]
mod gate;
#[path = "router/health.rs"]
mod health;
#[path = "router/thread.rs"]
mod thread;
