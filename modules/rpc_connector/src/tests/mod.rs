mod endpoint_tests;
