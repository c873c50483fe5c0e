mod integration {
    mod catalog_tests;
    mod classify_tests;
    mod config_tests;
    mod duplicate_tests;
    mod rename_tests;
    mod rules_tests;
}
