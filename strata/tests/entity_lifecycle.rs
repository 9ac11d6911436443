mod common;

use common::{Branch, Host};
use std::sync::atomic::Ordering;
use strata::{BranchIndex, Caches, Options, ReplacePolicy};

#[test]
fn three_branch_scenario() -> anyhow::Result<()> {
    common::init_logging();
    let mut o = Options::new();
    o.max_branches(3);
    let caches: common::TestCaches = Caches::new(&o);

    let a = Branch::new(1);
    let inode = caches.alloc_inode(3)?;
    let b1 = BranchIndex::new(1);

    let mut guard = inode.info().write_child();
    guard.set_branch(b1, Some(a.get()), ReplacePolicy::Release);
    guard.set_top(b1);
    guard.set_bottom(b1);
    let guard = guard.downgrade();
    assert_eq!(guard.branch(b1).map(|b| b.id()), Some(1));
    assert!(!inode.is_bad(&guard));
    drop(guard);

    let mut guard = inode.info().write_child();
    guard.set_branch(b1, None, ReplacePolicy::Release);
    assert_eq!(a.refs(), 0);
    assert!(inode.is_bad(&guard));
    Ok(())
}

#[test]
fn host_marked_bad() -> anyhow::Result<()> {
    let caches = common::caches(4);
    let branch = Branch::new(0);
    let inode = caches.alloc_inode(1)?;
    {
        let mut guard = inode.info().write_child();
        guard.set_branch(BranchIndex::TOP, Some(branch.get()), ReplacePolicy::Release);
        guard.set_top(BranchIndex::TOP);
        guard.set_bottom(BranchIndex::TOP);
    }

    inode.host().bad.store(true, Ordering::Release);
    let guard = inode.info().read_child();
    assert!(inode.is_bad(&guard));
    Ok(())
}

#[test]
fn references_balance_across_free() -> anyhow::Result<()> {
    let caches = common::caches(2);
    let branches: Vec<Branch> = (0..4).map(Branch::new).collect();

    let inode = caches.alloc_inode(4)?;
    {
        let mut guard = inode.info().write_child();
        for round in 0..5 {
            for (i, branch) in branches.iter().enumerate() {
                if (i + round) % 2 == 0 {
                    let index = BranchIndex::new(i as i16);
                    guard.set_branch(index, Some(branch.get()), ReplacePolicy::Release);
                }
            }
        }
        guard.set_top(BranchIndex::TOP);
        guard.set_bottom(BranchIndex::new(3));
        assert_eq!(guard.iter().count(), 4);
    }
    assert!(branches.iter().all(|b| b.refs() == 1));

    caches.free_inode(inode);
    caches.synchronize();
    assert!(branches.iter().all(|b| b.refs() == 0));
    Ok(())
}

#[test]
fn transplant_between_entities() -> anyhow::Result<()> {
    let caches = common::caches(2);
    let branch = Branch::new(2);
    let src = caches.alloc_dentry(3)?;
    let dst = caches.alloc_dentry(3)?;
    let b2 = BranchIndex::new(2);

    {
        let mut src_guard = src.info().write_child();
        src_guard.set_branch(b2, Some(branch.get()), ReplacePolicy::Release);
        let mut dst_guard = dst.info().write_child2();
        let moved = src_guard.set_branch(b2, None, ReplacePolicy::Retain);
        dst_guard.set_branch(b2, moved, ReplacePolicy::Release);
        dst_guard.set_top(b2);
        dst_guard.set_bottom(b2);
        assert!(src_guard.branch(b2).is_none());
        assert!(!dst.is_bad(&dst_guard));
    }
    assert_eq!(branch.refs(), 1);

    drop(src);
    drop(dst);
    caches.synchronize();
    assert_eq!(branch.refs(), 0);
    Ok(())
}

#[test]
fn rebuild_with_a_larger_table() -> anyhow::Result<()> {
    let caches = common::caches(1);
    let branch = Branch::new(0);
    let mut inode = caches.alloc_inode(1)?;
    inode
        .info_mut()
        .branches_mut()
        .set_branch(BranchIndex::TOP, Some(branch.get()), ReplacePolicy::Release);

    let info = inode.info_mut();
    info.fin();
    assert_eq!(branch.refs(), 0);
    info.init(3)?;
    assert_eq!(info.read_child().branch_count(), 3);
    Ok(())
}

#[test]
fn metrics_count_pool_traffic() -> anyhow::Result<()> {
    use strata::Metric;

    let caches = common::caches(8);
    let inode = caches.alloc_inode(1)?;
    let dentry = caches.alloc_dentry(1)?;
    caches.free_inode(inode);
    caches.free_dentry(dentry);
    caches.synchronize();

    let metrics = caches.metrics();
    assert_eq!(metrics.get(Metric::Allocs), 2);
    assert_eq!(metrics.get(Metric::PoolGrowths), 2);
    assert_eq!(
        metrics.get(Metric::DeferredFrees) + metrics.get(Metric::ImmediateFrees),
        2
    );
    assert_eq!(metrics.get(Metric::AllocFailures), 0);
    Ok(())
}
