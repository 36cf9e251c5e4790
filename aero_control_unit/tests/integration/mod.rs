mod rotor_adaptation;
mod vrs_recovery;
mod vrs_scenarios;
