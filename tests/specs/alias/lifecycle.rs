//! Alias lifecycle: set, resolve, list, and remove round trip through the CLI.

use crate::prelude::*;

#[test]
fn set_resolve_list_remove_round_trip() {
    let world = World::new();

    world.cli().args(&["send", "socket:eng:main", "hello"]).passes();

    world
        .cli()
        .args(&["alias", "set", "runbook", "socket:eng:main"])
        .passes()
        .stdout_has("runbook -> socket:eng:main");

    world.cli().args(&["alias", "resolve", "runbook"]).passes().stdout_has("runbook -> socket:eng:main");

    world.cli().args(&["alias", "list"]).passes().stdout_has("runbook").stdout_has("socket:eng:main");

    // Sending to the alias should route to the same session, not create a
    // new one under the alias's own name.
    world.cli().args(&["send", "runbook", "follow up"]).passes().stdout_has("Delivered to socket:eng:main");

    world.cli().args(&["alias", "remove", "runbook"]).passes().stdout_has("Removed alias runbook");

    // Once removed, resolving it falls back to echoing the literal input.
    world.cli().args(&["alias", "resolve", "runbook"]).passes().stdout_has("runbook -> runbook");
}

#[test]
fn alias_names_are_case_normalized() {
    let world = World::new();
    world.cli().args(&["send", "socket:eng:main", "hi"]).passes();

    world.cli().args(&["alias", "set", "RunBook", "socket:eng:main"]).passes();
    world.cli().args(&["alias", "resolve", "runbook"]).passes().stdout_has("socket:eng:main");
}
