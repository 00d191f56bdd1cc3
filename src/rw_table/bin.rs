use resworks::prelude::RwResult;
use resworks::{cli, rw_table};

fn main() -> RwResult<()> {
    let args = cli::table().get_matches();
    rw_table::run(&args)
}
