//! # 扇区缓存层
//!
//! 文件头树的每次下行都要重读沿途的文件头扇区，位图与目录
//! 又反复整片读写，直接打到块设备上会把一次文件操作放大成
//! 几十次扇区 I/O。缓存层把近期用过的扇区留在内存里：
//! 读写都落在内存副本上，写只置脏标记，逐出、显式同步或
//! 副本被丢弃时才真正写回设备。
//!
//! 缓存池全进程唯一，条目以 (块设备, 扇区号) 为键，
//! 多块磁盘共用一个池而互不串扰。内层文件头与扇区 0、1
//! 命中频繁，数据扇区多为一次性顺序访问，因此命中的条目
//! 移到队尾，逐出从队首(最久未用)找起。

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::mem;

use spin::Mutex;

use crate::BlockDevice;
use crate::SECTOR_SIZE;

static CACHE_POOL: Mutex<CachePool> = Mutex::new(CachePool::new());

/// 缓存池，队列按最近使用排序，队尾最新
struct CachePool {
    lru: VecDeque<Entry>,
}

struct Entry {
    sector: usize,
    device: Arc<dyn BlockDevice>,
    cache: Arc<Mutex<SectorCache>>,
}

#[inline]
pub fn get(sector: usize, device: Arc<dyn BlockDevice>) -> Arc<Mutex<SectorCache>> {
    CACHE_POOL.lock().get(sector, device)
}

/// 把所有脏扇区写回各自的设备
pub fn sync_all() {
    for entry in CACHE_POOL.lock().lru.iter() {
        entry.cache.lock().flush();
    }
}

/// 一个驻留内存的扇区副本，带脏标记，丢弃时写回
pub struct SectorCache {
    data: [u8; SECTOR_SIZE],
    sector: usize,
    device: Arc<dyn BlockDevice>,
    dirty: bool,
}

impl SectorCache {
    fn load(sector: usize, device: &Arc<dyn BlockDevice>) -> Self {
        let mut data = [0; SECTOR_SIZE];
        device.read_sector(sector, &mut data);

        Self {
            data,
            sector,
            device: device.clone(),
            dirty: false,
        }
    }

    /// 以 `T` 的只读视图访问扇区内偏移 `offset` 处的数据
    #[inline]
    pub fn map<T: Sized, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(unsafe { &*self.slot::<T>(offset) })
    }

    /// 以 `T` 的可写视图访问并把扇区置脏
    #[inline]
    pub fn map_mut<T: Sized, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        self.dirty = true;
        Self::check_view::<T>(offset);
        let slot = self.data[offset..].as_mut_ptr().cast();
        f(unsafe { &mut *slot })
    }

    fn flush(&mut self) {
        if mem::take(&mut self.dirty) {
            self.device.write_sector(self.sector, &self.data);
        }
    }

    fn slot<T: Sized>(&self, offset: usize) -> *const T {
        Self::check_view::<T>(offset);
        self.data[offset..].as_ptr().cast()
    }

    /// 视图必须完整落在扇区内，且对齐到 `T`
    fn check_view<T: Sized>(offset: usize) {
        assert!(offset + mem::size_of::<T>() <= SECTOR_SIZE);
        assert_eq!(offset % mem::align_of::<T>(), 0);
    }
}

impl Drop for SectorCache {
    fn drop(&mut self) {
        self.flush();
    }
}

impl CachePool {
    /// 缓存池的槽数上限。
    /// 逐出要求条目当下无人引用，而每条执行流同一时刻至多持有
    /// 一两个扇区的引用，64 个槽足以容纳多块磁盘的并发访问。
    const CAPACITY: usize = 64;

    const fn new() -> Self {
        Self {
            lru: VecDeque::new(),
        }
    }

    fn get(&mut self, sector: usize, device: Arc<dyn BlockDevice>) -> Arc<Mutex<SectorCache>> {
        // 命中：条目挪到队尾
        if let Some(index) = self
            .lru
            .iter()
            .position(|entry| entry.sector == sector && Arc::ptr_eq(&entry.device, &device))
        {
            let entry = self.lru.remove(index).unwrap();
            let cache = Arc::clone(&entry.cache);
            self.lru.push_back(entry);
            return cache;
        }

        if self.lru.len() == Self::CAPACITY {
            self.evict();
        }

        let cache = Arc::new(Mutex::new(SectorCache::load(sector, &device)));
        self.lru.push_back(Entry {
            sector,
            device,
            cache: Arc::clone(&cache),
        });

        cache
    }

    /// 从队首(最久未用)起找一个当下无人引用的条目丢弃，
    /// 脏数据随丢弃写回
    fn evict(&mut self) {
        let index = self
            .lru
            .iter()
            .position(|entry| Arc::strong_count(&entry.cache) == 1)
            .expect("sector cache exhausted");
        self.lru.remove(index);
    }
}
