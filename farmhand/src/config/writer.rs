//! INI serialization logic for converting `ConfigFile` → INI string.

use std::fmt::Write;

use super::keys::SettingKey;
use super::settings::ConfigFile;

/// One-line description written above each key.
fn describe(key: SettingKey) -> &'static str {
    match key {
        SettingKey::PacingIntervalMs => "Base delay between actions in ms (randomized +/-50%)",
        SettingKey::CyclePauseSecs => "Pause after every village has been farmed once",
        SettingKey::StepTimeoutSecs => "A pipeline step taking longer than this is retried",
        SettingKey::CommandCeiling => "Stop a village once it has this many outstanding actions",
        SettingKey::ReservedCommandSlots => "Slots kept free for manual commands",
        SettingKey::MaxTravelTimeSecs => "Maximum round-trip travel time of one action",
        SettingKey::MinAttackIntervalSecs => "Minimum spacing between arrivals on one target",
        SettingKey::TargetsPerVillage => "Maximum targets per village",
        SettingKey::MinDistance => "Minimum target distance in fields",
        SettingKey::MaxDistance => "Maximum target distance in fields",
        SettingKey::MinPoints => "Skip targets below this many points",
        SettingKey::MaxPoints => "Skip targets above this many points",
        SettingKey::CheckFullStorage => "Stop a village when its storage is full",
        SettingKey::AllowMultipleFarmers => "Let several villages farm the same target",
        SettingKey::SingleAttack => "At most one action in flight per target",
        SettingKey::IncludeVillageGroup => "Only farm from villages in this group (empty = all)",
        SettingKey::ExcludeVillageGroup => "Never farm from villages in this group",
        SettingKey::EventLogCapacity => "Number of event log entries kept",
    }
}

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let mut out = String::new();
    let mut section = "";

    for key in SettingKey::all() {
        if key.section() != section {
            if !section.is_empty() {
                out.push('\n');
            }
            section = key.section();
            let _ = writeln!(out, "[{section}]");
        }
        let _ = writeln!(out, "; {}", describe(*key));
        let _ = writeln!(out, "{} = {}", key.field(), key.get(&config.farm));
    }

    let _ = write!(
        out,
        "\n[logging]\n; Log file path\nfile = {}\n; Force debug-level logging\ndebug = {}\n",
        config.logging.file.to_string_lossy(),
        config.logging.debug
    );

    out
}
