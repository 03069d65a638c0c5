use crate::args::print_help;

pub fn execute() {
    print_help();
}
