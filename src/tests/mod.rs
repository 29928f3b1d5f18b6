// Test modules for arenakv
