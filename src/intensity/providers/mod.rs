pub mod nowtricity;
