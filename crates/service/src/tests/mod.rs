mod invariant_tests;
mod scenario_tests;
