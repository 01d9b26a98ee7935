//! Integration tests for the resolution convolution
